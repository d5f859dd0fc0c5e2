pub mod avatar;
pub mod client_ip;
pub mod cookie;
pub mod html;
pub mod jwt;
