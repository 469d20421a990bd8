/// Language features that can be switched off for a compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Accept `array` types.
    pub arrays: bool,
    /// Accept `record` types.
    pub records: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            arrays: true,
            records: true,
        }
    }
}
