pub mod application;

pub use application::{Application, ApplicationPatch, FormData, FormField};
