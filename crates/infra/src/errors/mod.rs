//! Boundary conversions from driver and transport errors into adapter errors.

/// `From` impls for driver and transport errors
pub mod conversions;
