use serde::{
    Deserialize,
    Serialize,
};

// Every list method on every service returns the same envelope, modulo the name of the
// field holding the items.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(
        default = "Vec::new",
        alias = "builds",
        alias = "clusters",
        alias = "operations",
        alias = "instances"
    )]
    pub items: Vec<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next_page_token.as_ref().is_some_and(|t| !t.is_empty())
    }
}
