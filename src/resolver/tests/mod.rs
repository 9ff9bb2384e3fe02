#[cfg(test)]
pub mod common;


#[cfg(test)]
mod test_bid;


#[cfg(test)]
mod test_must_contain;
