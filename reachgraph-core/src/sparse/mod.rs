//! Sparse graph assembly: KNN rows to COO, symmetrization, and CSR offsets.
//!
//! [`Symmetrize`] and [`CsrConversion`] are the capabilities the pipeline
//! depends on; [`MaxSymmetrizer`] and [`PrefixSumCsr`] are the CPU
//! implementations it uses by default.

mod coo;
mod csr;
mod symmetrize;

pub use self::{
    coo::{CooGraph, Edge, knn_to_coo, saturate_self_loops},
    csr::{CsrConversion, PrefixSumCsr},
    symmetrize::{MaxSymmetrizer, Symmetrize},
};

#[cfg(test)]
mod tests;
