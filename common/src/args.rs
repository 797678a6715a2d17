pub const ENABLE_DEBUG_LAYER_FLAG: &str = "--d3dEnableDebugLayer";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandLineArgs {
    args: Vec<String>,
}

impl CommandLineArgs {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments of the running process, without the program name.
    pub fn from_env() -> Self {
        Self::new(std::env::args().skip(1))
    }

    pub fn contains(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    pub fn enable_debug_layer(&self) -> bool {
        self.contains(ENABLE_DEBUG_LAYER_FLAG)
    }
}
