pub mod clock;
pub mod color;
pub mod editor;
pub mod model;
pub mod resolver;
pub mod window;
