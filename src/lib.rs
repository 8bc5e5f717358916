pub mod cli_args;
pub mod error;
mod extractor;
mod middleware;
mod route;
pub mod server;
mod state;
mod store;
mod traits;
mod types;

#[cfg(test)]
mod test;
