pub mod normalize;
pub mod range;
pub mod stft;
pub mod window;
