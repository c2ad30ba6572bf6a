use crate::TileCoord;

/// Tile URL template with `{s}`, `{z}`, `{x}` and `{y}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>, subdomains: Vec<String>) -> Self {
        Self {
            template: template.into(),
            subdomains,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether requests are spread over subdomain shards
    pub fn has_subdomain(&self) -> bool {
        self.template.contains("{s}")
    }

    /// Fetch URL for a tile; `{s}` gets a random shard on every call
    pub fn render(&self, tile: TileCoord) -> String {
        let subdomain = if self.has_subdomain() {
            self.pick_subdomain()
        } else {
            ""
        };
        self.template
            .replace("{s}", subdomain)
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    fn pick_subdomain(&self) -> &str {
        if self.subdomains.is_empty() {
            return "";
        }
        let mut seed = [0u8; 4];
        // A failed entropy read just pins the first shard
        let _ = getrandom::fill(&mut seed);
        let index = u32::from_le_bytes(seed) as usize % self.subdomains.len();
        &self.subdomains[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[test]
    fn test_render_coordinates() {
        let template = UrlTemplate::new("https://tiles.test/{z}/{x}/{y}.png", abc());
        assert!(!template.has_subdomain());
        assert_eq!(
            template.render(TileCoord::new(16, 19295, 24640)),
            "https://tiles.test/16/19295/24640.png"
        );
    }

    #[test]
    fn test_render_subdomain_from_set() {
        let template = UrlTemplate::new("https://{s}.tile.test/{z}/{x}/{y}.png", abc());
        assert!(template.has_subdomain());

        for _ in 0..50 {
            let url = template.render(TileCoord::new(1, 0, 1));
            assert!(
                ["a", "b", "c"]
                    .iter()
                    .any(|s| url == format!("https://{}.tile.test/1/0/1.png", s)),
                "unexpected url {}",
                url
            );
        }
    }

    #[test]
    fn test_axis_order_follows_template() {
        let template = UrlTemplate::new("https://server/tile/{z}/{y}/{x}", Vec::new());
        assert_eq!(template.render(TileCoord::new(3, 5, 2)), "https://server/tile/3/2/5");
    }
}
