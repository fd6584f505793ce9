pub mod console;
pub mod html;
pub mod style;
pub mod table;
