pub mod protocol;
pub mod sim;

#[cfg(test)]
mod tests;
