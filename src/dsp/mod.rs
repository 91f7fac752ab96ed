//! DSP: the per-sample signal path.
//!
//! Building blocks (ring buffer, one-pole filter, envelope follower, LFO,
//! lock-free knobs) at the bottom, one module per stompbox on top of them,
//! then the chain and the block engine that drive a whole board.

pub mod amp;
pub mod booster;
pub mod chain;
pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod effect;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod flanger;
pub mod fuzz;
pub mod oscillator;
pub mod overdrive;
pub mod param;
pub mod pitch_shifter;
pub mod reverb;
pub mod ring_buffer;
pub mod tuner;
