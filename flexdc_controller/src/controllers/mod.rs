pub mod flexdc;
