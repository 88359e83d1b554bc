//! The HMM step operators. Each wraps the bit of per-cycle physics it models
//! (dye loss, cleavage, detachment, imaging) and exposes a matched
//! `forward`/`backward` pair plus, where the step has a fittable parameter,
//! an `accumulate_fit` method that folds expected sufficient statistics into
//! a [`whatprot_model::SequencingModelFitter`].

pub mod block;
pub mod channel_loss;
pub mod detach;
pub mod edman;
pub mod emission;

pub use block::BlockTransition;
pub use channel_loss::ChannelLossTransition;
pub use detach::DetachTransition;
pub use edman::EdmanTransition;
pub use emission::PeptideEmission;
