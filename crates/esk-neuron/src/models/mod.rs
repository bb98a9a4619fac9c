//! Concrete neuron models, one per integration variant 

pub mod adex;
pub mod gif_psc_exp;
pub mod lif_psc_alpha;
pub mod lif_psc_exp_ps;

pub use adex::{Adex, AdexParams};
pub use gif_psc_exp::{GifPscExp, GifPscExpParams};
pub use lif_psc_alpha::{LifPscAlpha, LifPscAlphaParams};
pub use lif_psc_exp_ps::{LifPscExpPs, LifPscExpPsParams};
