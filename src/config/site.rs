//! Compilation of declarative `[site]` tables into matcher trees.

use serde_json::Value;

use crate::config::schema::{ParamDef, ParamKind, SiteDef};
use crate::routing::{page, redirect_to, switch, Matcher, ParamSpec, PatternError};

/// Build a matcher tree from a site definition. Pattern and ambiguity errors
/// surface exactly as they would from the builders.
pub fn compile_site(def: &SiteDef) -> Result<Matcher, PatternError> {
    match def {
        SiteDef::Redirect { to } => Ok(redirect_to(to.clone())),

        SiteDef::Page {
            title,
            meta,
            content,
            params,
        } => {
            let mut builder = page().content(content.clone().unwrap_or(Value::Null));
            if let Some(title) = title {
                builder = builder.title(title.clone());
            }
            if !meta.is_empty() {
                builder = builder.meta(meta.clone());
            }
            for param in params {
                builder = builder.param(param_spec(param));
            }
            Ok(builder.build())
        }

        SiteDef::Switch {
            title,
            meta,
            data,
            content,
            params,
            children,
        } => {
            let mut builder = switch();
            if let Some(title) = title {
                builder = builder.title(title.clone());
            }
            if !meta.is_empty() {
                builder = builder.meta(meta.clone());
            }
            if let Some(data) = data {
                builder = builder.data(data.clone());
            }
            if let Some(content) = content {
                builder = builder.content(content.clone());
            }
            for param in params {
                builder = builder.param(param_spec(param));
            }
            for (template, child) in children {
                builder = builder.child(template.clone(), compile_site(child)?);
            }
            builder.build()
        }
    }
}

fn param_spec(def: &ParamDef) -> ParamSpec {
    let mut spec = match def.kind {
        ParamKind::String => ParamSpec::string(def.name.clone()),
        ParamKind::Number => ParamSpec::number(def.name.clone()),
        ParamKind::Flag => ParamSpec::flag(def.name.clone()),
    };
    if def.required {
        spec = spec.required();
    }
    if let Some(default) = &def.default {
        spec = spec.default_value(default.clone());
    }
    spec
}
