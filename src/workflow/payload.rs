use serde::Serialize;
use std::collections::BTreeMap;

pub const NEGATIVE_PROMPT: &str = "blurry, low quality";
pub const IMAGE_SIZE: u32 = 768;
pub const SEED: u64 = 12345;
pub const STEPS: u32 = 20;
pub const CFG_SCALE: f32 = 7.0;
pub const SAMPLER: &str = "euler";
pub const SCHEDULER: &str = "normal";
pub const FILENAME_PREFIX: &str = "api_test";

/// Reference to one output slot of another node, serialized as `["<id>", slot]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeLink(pub String, pub u32);

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "class_type", content = "inputs")]
pub enum Node {
    CheckpointLoaderSimple {
        ckpt_name: String,
    },
    #[serde(rename = "CLIPTextEncode")]
    ClipTextEncode {
        text: String,
        clip: NodeLink,
    },
    EmptyLatentImage {
        width: u32,
        height: u32,
        batch_size: u32,
    },
    KSampler {
        seed: u64,
        steps: u32,
        cfg: f32,
        sampler_name: String,
        scheduler: String,
        denoise: f32,
        model: NodeLink,
        positive: NodeLink,
        negative: NodeLink,
        latent_image: NodeLink,
    },
    #[serde(rename = "VAEDecode")]
    VaeDecode {
        samples: NodeLink,
        vae: NodeLink,
    },
    SaveImage {
        filename_prefix: String,
        images: NodeLink,
    },
}

/// Body posted to ComfyUI's `/prompt` endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct ComfyUIPrompt {
    pub prompt: BTreeMap<String, Node>,
    pub client_id: String,
    #[serde(skip)]
    pub output_node_id: String,
}

struct CurrentNodeId {
    inner: u32,
}

impl CurrentNodeId {
    fn new() -> Self {
        Self { inner: 0 }
    }

    fn get(&mut self) -> String {
        self.inner += 1;
        self.inner.to_string()
    }
}

/// The text-to-image graph the relay submits. The checkpoint is fixed per
/// process and the prompt text per request, every other input is constant.
#[derive(Clone, Debug)]
pub struct TextToImageTemplate {
    checkpoint: String,
}

impl TextToImageTemplate {
    pub fn new(checkpoint: impl Into<String>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
        }
    }

    pub fn render(&self, prompt_text: &str) -> ComfyUIPrompt {
        let mut prompt = BTreeMap::new();
        let mut current_node_id = CurrentNodeId::new();

        let checkpoint_node_id = current_node_id.get();
        prompt.insert(
            checkpoint_node_id.clone(),
            Node::CheckpointLoaderSimple {
                ckpt_name: self.checkpoint.clone(),
            },
        );
        let unet_node = NodeLink(checkpoint_node_id.clone(), 0);
        let clip_node = NodeLink(checkpoint_node_id.clone(), 1);
        let vae_node = NodeLink(checkpoint_node_id, 2);

        let positive_node_id = current_node_id.get();
        prompt.insert(
            positive_node_id.clone(),
            Node::ClipTextEncode {
                text: prompt_text.to_string(),
                clip: clip_node.clone(),
            },
        );

        let negative_node_id = current_node_id.get();
        prompt.insert(
            negative_node_id.clone(),
            Node::ClipTextEncode {
                text: NEGATIVE_PROMPT.to_string(),
                clip: clip_node,
            },
        );

        let latent_node_id = current_node_id.get();
        prompt.insert(
            latent_node_id.clone(),
            Node::EmptyLatentImage {
                width: IMAGE_SIZE,
                height: IMAGE_SIZE,
                batch_size: 1,
            },
        );

        let k_sampler_node_id = current_node_id.get();
        prompt.insert(
            k_sampler_node_id.clone(),
            Node::KSampler {
                seed: SEED,
                steps: STEPS,
                cfg: CFG_SCALE,
                sampler_name: SAMPLER.to_string(),
                scheduler: SCHEDULER.to_string(),
                denoise: 1.0,
                model: unet_node,
                positive: NodeLink(positive_node_id, 0),
                negative: NodeLink(negative_node_id, 0),
                latent_image: NodeLink(latent_node_id, 0),
            },
        );

        let decode_node_id = current_node_id.get();
        prompt.insert(
            decode_node_id.clone(),
            Node::VaeDecode {
                samples: NodeLink(k_sampler_node_id, 0),
                vae: vae_node,
            },
        );

        let output_node_id = current_node_id.get();
        prompt.insert(
            output_node_id.clone(),
            Node::SaveImage {
                filename_prefix: FILENAME_PREFIX.to_string(),
                images: NodeLink(decode_node_id, 0),
            },
        );

        ComfyUIPrompt {
            prompt,
            client_id: uuid::Uuid::new_v4().to_string(),
            output_node_id,
        }
    }
}
