pub mod conversations;
pub mod playground;
pub mod settings;
pub mod shared;

pub use conversations::ConversationSidebar;
pub use playground::PlaygroundView;
pub use settings::SettingsPanel;
