/// Panorama catalog: the static, ordered list of scenes.
///
/// Built once at startup (from `config.toml` or the built-in set) and
/// never mutated afterwards. Everything else refers to scenes by index.

/// One panoramic scene and its narrative metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneDescriptor {
    pub id: u32,
    pub title: String,
    pub status_label: String,
    /// Meter baseline, 0..=100.
    pub meter_value: f32,
    pub narrative_text: String,
    /// Image path, relative to the assets directory.
    pub image_ref: String,
}

#[derive(Clone, Debug)]
pub struct Catalog {
    scenes: Vec<SceneDescriptor>,
}

impl Catalog {
    /// Build a catalog from configured entries.
    ///
    /// Duplicate ids are dropped (first wins), meter values are clamped
    /// into 0..=100 (NaN becomes 0), and an empty result falls back to the
    /// built-in scenes.
    pub fn from_entries(entries: Vec<SceneDescriptor>) -> Self {
        let mut scenes: Vec<SceneDescriptor> = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if scenes.iter().any(|s| s.id == entry.id) {
                log::warn!("catalog: duplicate scene id {} ignored ({})", entry.id, entry.title);
                continue;
            }
            if !(0.0..=100.0).contains(&entry.meter_value) {
                log::warn!(
                    "catalog: scene {} meter {} clamped into 0..=100",
                    entry.id, entry.meter_value
                );
                entry.meter_value = if entry.meter_value.is_nan() {
                    0.0
                } else {
                    entry.meter_value.clamp(0.0, 100.0)
                };
            }
            scenes.push(entry);
        }
        if scenes.is_empty() {
            return Catalog::builtin();
        }
        Catalog { scenes }
    }

    /// The three built-in scenes.
    pub fn builtin() -> Self {
        Catalog { scenes: builtin_scenes() }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn last_index(&self) -> usize {
        self.scenes.len().saturating_sub(1)
    }

    /// Scene at `index`, clamped into range. The catalog is never empty.
    pub fn get(&self, index: usize) -> &SceneDescriptor {
        &self.scenes[index.min(self.last_index())]
    }

    /// Position of the scene with the given id (drawer / digit shortcuts).
    pub fn index_of_id(&self, id: u32) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneDescriptor> {
        self.scenes.iter()
    }
}

pub fn builtin_scenes() -> Vec<SceneDescriptor> {
    vec![
        SceneDescriptor {
            id: 1,
            title: "Collina – Soglia".into(),
            status_label: "Apertura".into(),
            meter_value: 72.0,
            narrative_text: "Qui l’esperienza è reale. Ma il limite la trasforma.".into(),
            image_ref: "pano1_collina.jpg".into(),
        },
        SceneDescriptor {
            id: 2,
            title: "Natura-matrigna".into(),
            status_label: "Disincanto".into(),
            meter_value: 38.0,
            narrative_text: "Qui non c’è cattiveria. C’è indifferenza. È peggio.".into(),
            image_ref: "pano2_deserto.jpg".into(),
        },
        SceneDescriptor {
            id: 3,
            title: "Vesuvio – Ginestre".into(),
            status_label: "Resistenza".into(),
            meter_value: 58.0,
            narrative_text: "La vita non nega la catastrofe. Ci cresce accanto.".into(),
            image_ref: "pano3_vesuvio.jpg".into(),
        },
    ]
}
