use core::fmt;
use url::Url;

const SEP: char = '/';

/// Incrementally buildable server URL.
#[derive(Clone)]
pub struct Resource {
    url: Url,
}

impl Resource {
    #[must_use]
    pub fn new(uri: &str) -> Option<Resource> {
        let base = Url::parse(uri).ok()?;
        Some(Resource { url: base })
    }

    pub fn append_path(&mut self, path: &str) -> &mut Self {
        let trailing = path.chars().next_back() == Some(SEP);
        if let Ok(mut segments) = self.url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split(SEP).filter(|s| !s.is_empty()));
            if trailing {
                // keep the trailing slash the caller asked for
                segments.push("");
            }
        }
        self
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
