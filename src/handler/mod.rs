pub mod extend;
