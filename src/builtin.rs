pub const BUILTIN_CSS: &str = include_str!("builtin.css");
