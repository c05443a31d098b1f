//! Generated environment files.
//!
//! [`installer`] encrypts a template at generation time and embeds the key;
//! [`bootstrap`] reverses it once inside the generated runtime.

pub mod bootstrap;
pub mod installer;
pub mod template;

pub use bootstrap::{
    bootstrap, BootstrapDecryptor, BootstrapReport, DecryptPolicy, Environment, MemoryEnvironment,
    ProcessEnvironment,
};
pub use installer::{
    load_assignments, EnvWriter, EnvironmentSecretInstaller, InstallReport, InstallSecrets,
    RenderStats,
};
pub use template::{Anchors, EnvTemplate, InstallLayout, TemplateLine};
