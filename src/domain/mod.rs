pub mod audio;
pub mod jobs;
pub mod keys;
pub mod shared;
pub mod text;
