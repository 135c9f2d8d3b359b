use fixed::types::I32F32;

/// Q32.32 fixed-point used for research effect strengths, so that summing
/// effects from many completed nodes is exact and order-independent.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only when loading data.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and the view codec.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Whether an effect strength counts as "unlocked".
#[inline]
pub fn is_positive(v: Fixed64) -> bool {
    v > Fixed64::ZERO
}
