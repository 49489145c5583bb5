/// Errors raised by the registry and by plugins themselves.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No plugin is registered under this name.
    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    /// The construction arguments do not fit the plugin's input.
    #[error("Not a valid plugin invocation for '{name}': {reason}")]
    NotAValidPlugin { name: String, reason: String },

    /// The name is taken by a different implementation, or is unusable.
    #[error("Plugin registration error: {0}")]
    PluginRegistrationError(String),

    /// The plugin was constructed but failed while running.
    #[error("Plugin '{name}' failed: {reason}")]
    Execution { name: String, reason: String },
}
