//! rewrite command - Show the edge rewrite of a URI

use anyhow::Result;

use crate::edge::rewrite_uri;

pub fn rewrite(uri: &str) -> Result<()> {
    println!("{}", rewrite_uri(uri));
    Ok(())
}
