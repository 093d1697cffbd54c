//! Capability flags a dialect publishes to the compiler.

/// What the target engine can express; consulted both while building and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlProviderFlags {
    pub is_skip_supported: bool,
    pub is_take_supported: bool,
    /// `TOP (@p)` / `LIMIT @p` allowed; otherwise take values are inlined.
    pub accepts_take_as_parameter: bool,
    /// DISTINCT may be combined with ORDER BY on non-projected expressions.
    pub is_distinct_order_by_supported: bool,
    pub is_insert_or_update_supported: bool,
    pub is_apply_join_supported: bool,
}

impl Default for SqlProviderFlags {
    fn default() -> Self {
        Self {
            is_skip_supported: true,
            is_take_supported: true,
            accepts_take_as_parameter: true,
            is_distinct_order_by_supported: true,
            is_insert_or_update_supported: false,
            is_apply_join_supported: false,
        }
    }
}
