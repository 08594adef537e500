pub mod assembler;
pub mod wav;
