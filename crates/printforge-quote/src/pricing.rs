use chrono::{DateTime, Utc};
use printforge_core::{CacheConfig, Money, PrintForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::analyzer::{model_hash, MeshAnalyzer, MeshReport};
use crate::cache::{CacheStats, QuotationCache, QuoteKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub cost_per_cm3: Money,
    pub machine_rate_per_hour: Money,
    /// Deposition rate used to estimate print time.
    pub mm3_per_hour: f64,
}

#[derive(Debug, Clone)]
pub struct MaterialTable {
    materials: HashMap<String, Material>,
}

impl Default for MaterialTable {
    fn default() -> Self {
        let mut table = Self {
            materials: HashMap::new(),
        };
        table.add(Material {
            name: "PLA".into(),
            cost_per_cm3: Money::from_cents(8),
            machine_rate_per_hour: Money::from_cents(150),
            mm3_per_hour: 15_000.0,
        });
        table.add(Material {
            name: "PETG".into(),
            cost_per_cm3: Money::from_cents(10),
            machine_rate_per_hour: Money::from_cents(150),
            mm3_per_hour: 12_000.0,
        });
        table.add(Material {
            name: "ABS".into(),
            cost_per_cm3: Money::from_cents(9),
            machine_rate_per_hour: Money::from_cents(175),
            mm3_per_hour: 13_000.0,
        });
        table.add(Material {
            name: "Resin".into(),
            cost_per_cm3: Money::from_cents(35),
            machine_rate_per_hour: Money::from_cents(250),
            mm3_per_hour: 8_000.0,
        });
        table
    }
}

impl MaterialTable {
    pub fn add(&mut self, material: Material) {
        self.materials
            .insert(material.name.to_ascii_uppercase(), material);
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(&name.to_ascii_uppercase())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.materials.values().map(|m| m.name.clone()).collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub model_hash: String,
    pub material: String,
    pub mesh: MeshReport,
    pub material_cost: Money,
    pub machine_cost: Money,
    pub total: Money,
    pub computed_at: DateTime<Utc>,
}

/// Front door for quoting: hash the model, consult the cache, fall back to
/// analysis + pricing on a miss.
pub struct Quoter {
    cache: QuotationCache,
    materials: MaterialTable,
}

impl Quoter {
    pub fn new(cache_config: CacheConfig, materials: MaterialTable) -> Self {
        Self {
            cache: QuotationCache::new(cache_config),
            materials,
        }
    }

    pub fn quote(&self, model_bytes: &[u8], material_name: &str) -> Result<Quote> {
        let material = self.materials.get(material_name).ok_or_else(|| {
            PrintForgeError::Validation(format!(
                "unknown material '{}'; available: {}",
                material_name,
                self.materials.names().join(", ")
            ))
        })?;

        let key = QuoteKey {
            model_hash: model_hash(model_bytes),
            material: material.name.clone(),
        };
        if let Some(cached) = self.cache.get(&key) {
            debug!(model = %key.model_hash, material = %key.material, "quote cache hit");
            return Ok(cached);
        }

        let mesh = MeshAnalyzer::analyze(model_bytes)
            .map_err(|e| PrintForgeError::Analysis(e.to_string()))?;
        let quote = price(&key.model_hash, material, mesh)?;
        self.cache.insert(key, quote.clone());
        Ok(quote)
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep()
    }
}

fn price(hash: &str, material: &Material, mesh: MeshReport) -> Result<Quote> {
    let volume_cm3 = mesh.volume_mm3 / 1000.0;
    let material_cents = (volume_cm3 * material.cost_per_cm3.cents() as f64).ceil() as i64;
    let hours = mesh.volume_mm3 / material.mm3_per_hour;
    let machine_cents = (hours * material.machine_rate_per_hour.cents() as f64).ceil() as i64;

    let material_cost = Money::from_cents(material_cents);
    let machine_cost = Money::from_cents(machine_cents);
    let total = material_cost
        .checked_add(machine_cost)
        .ok_or_else(|| PrintForgeError::InvalidOperation("quote total overflow".into()))?;

    Ok(Quote {
        model_hash: hash.to_string(),
        material: material.name.clone(),
        mesh,
        material_cost,
        machine_cost,
        total,
        computed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use printforge_core::CacheConfig;

    /// 10 mm cube as a binary STL (12 triangles, watertight).
    fn cube_stl() -> Vec<u8> {
        let s = 10.0f32;
        let p = |x: f32, y: f32, z: f32| [x, y, z];
        let corners = [
            p(0.0, 0.0, 0.0),
            p(s, 0.0, 0.0),
            p(s, s, 0.0),
            p(0.0, s, 0.0),
            p(0.0, 0.0, s),
            p(s, 0.0, s),
            p(s, s, s),
            p(0.0, s, s),
        ];
        // Two triangles per face, outward winding
        let faces: [[usize; 3]; 12] = [
            [0, 2, 1],
            [0, 3, 2], // bottom
            [4, 5, 6],
            [4, 6, 7], // top
            [0, 1, 5],
            [0, 5, 4], // front
            [1, 2, 6],
            [1, 6, 5], // right
            [2, 3, 7],
            [2, 7, 6], // back
            [3, 0, 4],
            [3, 4, 7], // left
        ];

        let mut out = vec![0u8; 80];
        out.extend_from_slice(&(faces.len() as u32).to_le_bytes());
        for face in faces {
            out.extend_from_slice(&[0u8; 12]);
            for &idx in &face {
                for coord in corners[idx] {
                    out.extend_from_slice(&coord.to_le_bytes());
                }
            }
            out.extend_from_slice(&[0u8; 2]);
        }
        out
    }

    fn quoter() -> Quoter {
        Quoter::new(CacheConfig::default(), MaterialTable::default())
    }

    #[test]
    fn cube_quote_is_priced_from_geometry() {
        let quoter = quoter();
        let quote = quoter.quote(&cube_stl(), "PLA").unwrap();

        assert_eq!(quote.mesh.triangle_count, 12);
        assert!((quote.mesh.volume_mm3 - 1000.0).abs() < 1e-6);
        assert!(quote.mesh.watertight);
        // 1 cm3 of PLA at 8 cents
        assert_eq!(quote.material_cost, Money::from_cents(8));
        // 1000 mm3 at 15000 mm3/h -> 0.0667 h at 150 cents/h, ceiled
        assert_eq!(quote.machine_cost, Money::from_cents(11));
        assert_eq!(quote.total, Money::from_cents(19));
    }

    #[test]
    fn repeat_quotes_hit_the_cache() {
        let quoter = quoter();
        let bytes = cube_stl();
        let first = quoter.quote(&bytes, "PLA").unwrap();
        let second = quoter.quote(&bytes, "PLA").unwrap();
        assert_eq!(first.computed_at, second.computed_at);

        let stats = quoter.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn material_lookup_is_case_insensitive() {
        let quoter = quoter();
        assert!(quoter.quote(&cube_stl(), "pla").is_ok());
    }

    #[test]
    fn unknown_material_is_a_validation_error() {
        let quoter = quoter();
        let err = quoter.quote(&cube_stl(), "Unobtainium").unwrap_err();
        assert!(matches!(err, PrintForgeError::Validation(_)));
    }

    #[test]
    fn malformed_model_is_an_analysis_error() {
        let quoter = quoter();
        let err = quoter.quote(b"garbage", "PLA").unwrap_err();
        assert!(matches!(err, PrintForgeError::Analysis(_)));
    }
}
