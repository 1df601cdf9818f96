pub mod cli;
pub mod log;
pub mod ux;

#[cfg(test)]
mod test_utils;
