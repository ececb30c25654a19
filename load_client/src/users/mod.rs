pub mod simple_web;

pub use simple_web::SimpleWebUser;
