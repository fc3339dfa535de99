#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use wikistack::config::EngineConfig;
use wikistack::engine::Engine;
use wikistack::types::{Fields, LayerDefinition, Recipe, Role, RoleSet};

pub struct TestEngine {
    pub temp_dir: TempDir,
    pub engine: Arc<Engine>,
}

impl TestEngine {
    pub fn open() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = EngineConfig {
            data_dir: temp_dir.path().join("data"),
            session_ttl_secs: Some(3600),
            ..EngineConfig::default()
        };
        let engine = Engine::open(&config).expect("open engine");
        Self {
            temp_dir,
            engine: Arc::new(engine),
        }
    }

    pub fn bags(&self, names: &[&str]) {
        for name in names {
            self.engine
                .bags()
                .create(name, None, None)
                .expect("create bag");
        }
    }

    pub fn recipe(&self, name: &str, layers: &[(&str, i64, bool)]) -> Recipe {
        let recipe = self
            .engine
            .recipes()
            .create(name, None, None)
            .expect("create recipe");
        let layers: Vec<LayerDefinition> = layers
            .iter()
            .map(|(bag, position, with_acl)| LayerDefinition {
                bag: (*bag).to_string(),
                position: *position,
                with_acl: *with_acl,
                load_modules: false,
            })
            .collect();
        self.engine
            .recipes()
            .set_layers(&recipe, &layers)
            .expect("set layers");
        recipe
    }

    pub fn role(&self, name: &str) -> Role {
        self.engine.create_role(name, None).expect("create role")
    }
}

pub fn text(body: &str) -> Fields {
    Fields::from([("text".to_string(), body.to_string())])
}

pub fn roles_of(roles: &[&Role]) -> RoleSet {
    roles.iter().map(|role| role.id.clone()).collect()
}
