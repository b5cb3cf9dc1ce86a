// ctrlgen — animator controller code generator
//
// Library root. `codegen::codegen` turns a `model::Controller` into a C#
// program that rebuilds it; `pipeline` handles the file-level plumbing.

pub mod codegen;
pub mod emit;
pub mod error;
pub mod id;
pub mod model;
pub mod naming;
pub mod pipeline;
