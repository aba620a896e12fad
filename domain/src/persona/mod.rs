pub mod entities;

pub use entities::{Mcp, Persona, PersonaRole};
