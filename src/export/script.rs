//! After Effects keyframe script: the font timeline as `Source Text` keys on one text layer.

use std::fmt::{self, Write as _};

use crate::config::AnimationConfig;
use crate::export::job::ExportCoordinator;
use crate::export::{Artifact, ExportKind};
use crate::fonts::pool::FontPool;
use crate::foundation::error::{TypeCutError, TypeCutResult};
use crate::timing::Timeline;

/// Composition settings not carried by [`AnimationConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Composition name, also used as the undo group label.
    pub comp_name: String,
    pub fps: u32,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            comp_name: "TypeCut".to_owned(),
            fps: 30,
        }
    }
}

/// Pure text templating over the shared timeline; identical inputs give identical bytes.
///
/// One `Source Text` key per switch step inside the duration, at `i * ms_per_switch`.
pub fn generate_script(
    cfg: &AnimationConfig,
    timeline: &Timeline,
    opts: &ScriptOptions,
) -> TypeCutResult<String> {
    let timing = timeline.timing();
    let steps = timing.steps_in_duration().max(1);
    let ms_per_switch = timing.ms_per_switch();

    let seq = timeline.sequence();
    let keys = (0..steps)
        .map(|i| -> TypeCutResult<(String, String)> {
            let font = js_string(seq.cyclic(i).unwrap_or("Inter"))?;
            Ok((seconds(i * ms_per_switch), font))
        })
        .collect::<TypeCutResult<Vec<_>>>()?;
    let header = ScriptHeader {
        comp_name: js_string(&opts.comp_name)?,
        text: js_string(&cfg.text)?,
        cfg,
        fps: opts.fps,
    };

    let mut out = String::new();
    write_script(&mut out, &header, &keys)
        .map_err(|e| TypeCutError::encode(ExportKind::AeScript, e.to_string()))?;
    Ok(out)
}

struct ScriptHeader<'a> {
    /// Already quoted for JavaScript.
    comp_name: String,
    text: String,
    cfg: &'a AnimationConfig,
    fps: u32,
}

fn write_script(out: &mut String, h: &ScriptHeader<'_>, keys: &[(String, String)]) -> fmt::Result {
    let (cfg, comp_name) = (h.cfg, &h.comp_name);
    let c = cfg.text_color;
    writeln!(out, "// TypeCut After Effects script (generated)")?;
    writeln!(out, "(function(){{")?;
    writeln!(out, "  app.beginUndoGroup({comp_name});")?;
    writeln!(out, "  var proj = app.project || app.newProject();")?;
    writeln!(
        out,
        "  var comp = proj.items.addComp({comp_name}, {}, {}, 1.0, {}, {});",
        cfg.canvas.width,
        cfg.canvas.height,
        seconds(cfg.duration_ms),
        h.fps
    )?;
    writeln!(out, "  var textLayer = comp.layers.addText({});", h.text)?;
    writeln!(out, "  var tdProp = textLayer.property(\"Source Text\");")?;
    writeln!(out, "  var td = tdProp.value;")?;
    writeln!(out, "  td.fontSize = {};", cfg.font_size)?;
    writeln!(out, "  td.fillColor = [{}, {}, {}];", c.r, c.g, c.b)?;
    writeln!(out, "  tdProp.setValue(td);")?;
    writeln!(out, "  while (tdProp.numKeys > 0) tdProp.removeKey(1);")?;
    for (t, font) in keys {
        writeln!(
            out,
            "  var doc = tdProp.value; doc.font = {font}; tdProp.setValueAtTime({t}, doc);"
        )?;
    }
    writeln!(out, "  app.endUndoGroup();")?;
    write!(out, "}})();")
}

/// Generate the script as a downloadable artifact under the export slot.
#[tracing::instrument(skip_all)]
pub fn export_script(
    coordinator: &ExportCoordinator,
    cfg: &AnimationConfig,
    pool: &FontPool,
    opts: &ScriptOptions,
) -> TypeCutResult<Artifact> {
    let guard = coordinator.begin(ExportKind::AeScript)?;
    let script = cfg.validate().and_then(|()| {
        let timeline = Timeline::new(pool, cfg.duration_ms, cfg.switch_count);
        generate_script(cfg, &timeline, opts)
    });
    guard.progress(95);
    let artifact = guard.complete(
        script.map(|s| Artifact::new(ExportKind::AeScript, &cfg.text, s.into_bytes())),
    )?;
    tracing::info!(bytes = artifact.bytes.len(), "script export finished");
    Ok(artifact)
}

fn js_string(s: &str) -> TypeCutResult<String> {
    serde_json::to_string(s).map_err(|e| TypeCutError::encode(ExportKind::AeScript, e.to_string()))
}

/// Milliseconds as seconds with at most three decimals and no trailing zeros.
fn seconds(ms: u64) -> String {
    let (whole, frac) = (ms / 1000, ms % 1000);
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:03}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
