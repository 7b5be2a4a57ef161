//! The closed set of local entity types share a narrow read-only trait
//! so generic code (the File Parser, the Duplicate Detector) doesn't need
//! to know which concrete type it's holding.

use std::collections::HashMap;

pub trait Entity {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn content(&self) -> &str;
    fn labels(&self) -> Vec<String>;
    fn remote_ids(&self) -> &HashMap<String, String>;
}
