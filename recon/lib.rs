#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(unused_variables)]

pub mod basis;
pub mod config;
pub mod lasso;
pub mod signal;
pub mod simulate;
pub mod window;
