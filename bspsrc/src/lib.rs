pub mod app;
pub mod binaries;
pub mod bsp;
pub mod config;
pub mod decompile;
pub mod error;
pub mod geom;
pub mod orchestrator;
pub mod prelude;
pub mod protection;
pub mod texture;
pub mod vmf;

#[cfg(test)]
mod test_bsp;
