pub mod decode;
pub mod highpass;
