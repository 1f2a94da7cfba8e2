use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use utoipa::ToSchema;

/// Location of a rendered image inside ComfyUI's output store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_image_type")]
    pub kind: String,
}

fn default_image_type() -> String {
    "output".to_string()
}

impl ImageDescriptor {
    /// A file sitting at the root of the output directory.
    pub fn output(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: String::new(),
            kind: default_image_type(),
        }
    }

    fn append_query(&self, url: &mut Url) {
        url.query_pairs_mut()
            .clear()
            .append_pair("filename", &self.filename)
            .append_pair("subfolder", &self.subfolder)
            .append_pair("type", &self.kind);
    }

    /// ComfyUI `/view` url serving this image.
    pub fn upstream_url(&self, comfy_url: &Url) -> Result<Url, url::ParseError> {
        let mut url = comfy_url.join("view")?;
        self.append_query(&mut url);
        Ok(url)
    }

    /// Url of the view relay serving this image, `origin` must end with `/`.
    pub fn relay_url(&self, origin: &Url) -> Result<Url, url::ParseError> {
        let mut url = origin.join("api/image/view")?;
        self.append_query(&mut url);
        Ok(url)
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawImageRef {
    #[serde(default)]
    filename: Option<String>,
    subfolder: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct NodeOutput {
    #[serde(default)]
    images: Vec<RawImageRef>,
}

#[derive(Clone, Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    outputs: Option<HashMap<String, NodeOutput>>,
}

/// Body of `GET /history/{prompt_id}`. Empty until the job has finished.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct History(HashMap<String, HistoryEntry>);

impl History {
    /// First image of the first output node that produced any, `None` while
    /// the job is still queued or running. Numeric node ids come first in
    /// numeric order, other ids follow sorted as text. Image entries without
    /// a filename are ignored.
    pub fn first_image(&self, prompt_id: &str) -> Option<ImageDescriptor> {
        let outputs = self.0.get(prompt_id)?.outputs.as_ref()?;

        let mut nodes: Vec<_> = outputs.iter().collect();
        nodes.sort_by(|(a, _), (b, _)| node_order(a).cmp(&node_order(b)));

        nodes.into_iter().find_map(|(_, node)| {
            node.images.iter().find_map(|image| {
                let filename = image.filename.as_ref().filter(|f| !f.is_empty())?;
                Some(ImageDescriptor {
                    filename: filename.clone(),
                    subfolder: image.subfolder.clone().unwrap_or_default(),
                    kind: image.kind.clone().unwrap_or_else(default_image_type),
                })
            })
        })
    }
}

fn node_order(id: &str) -> (bool, u32, &str) {
    match id.parse::<u32>() {
        Ok(number) => (false, number, ""),
        Err(_) => (true, 0, id),
    }
}
