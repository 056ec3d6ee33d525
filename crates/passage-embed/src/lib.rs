use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use passage_core::traits::Embedder;

pub mod device;
pub mod hash;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

pub const BGE_M3_DIM: usize = 1024;
const MAX_LEN: usize = 256;

/// BGE-M3 dense embeddings: XLM-RoBERTa hidden states, masked mean pooled and L2-normalized.
pub struct BgeM3Embedder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device }

impl BgeM3Embedder {
    pub fn load() -> Result<Self> {
        Self::load_from(&resolve_model_dir()?)
    }

    pub fn load_from(model_dir: &std::path::Path) -> Result<Self> {
        let device = select_device();
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(dir = %model_dir.display(), "BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let enc = tokenize_on_device(&self.tokenizer, text, MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)?;
        let hidden = self.model.forward(&enc.input_ids, &enc.attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &enc.attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != BGE_M3_DIM {
            return Err(anyhow!("model produced {} dimensions, expected {}", emb.len(), BGE_M3_DIM));
        }
        tracing::debug!(tokens = enc.tokens, ms = start.elapsed().as_millis() as u64, "embedded query");
        Ok(emb)
    }
}

impl Embedder for BgeM3Embedder {
    fn dim(&self) -> usize { BGE_M3_DIM }
    fn max_len(&self) -> usize { MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// `HashEmbedder` when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`, otherwise BGE-M3.
pub fn default_embedder(dim: usize) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake {
        tracing::info!(dim, "using hash embeddings");
        return Ok(Arc::new(HashEmbedder::new(dim)));
    }
    if dim != BGE_M3_DIM {
        return Err(anyhow!("BGE-M3 produces {} dimensions but {} are configured", BGE_M3_DIM, dim));
    }
    Ok(Arc::new(BgeM3Embedder::load()?))
}

pub fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(dir);
            if p.exists() { return Ok(p); }
            tracing::warn!(var, path = %p.display(), "model dir does not exist");
        }
    }
    let local = PathBuf::from("models/bge-m3");
    if local.exists() { return Ok(local); }
    Err(anyhow!("Could not locate BGE-M3 model directory (set APP_MODEL_DIR)"))
}
