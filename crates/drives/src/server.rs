//! The drive MCP server.
//!
//! A single-connection stdio JSON-RPC server exposing three tools over
//! the drive library: `get_context`, `get_section`, and `add_note`. All
//! handler failures surface as `Error: ...` text content rather than
//! protocol errors, so agents can read them.

use anyhow::{anyhow, Result as AnyResult};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam, Tool,
    ToolAnnotations,
};
use rmcp::service::serve_server;
use rmcp::ServerHandler;
use serde_json::{json, Map as JsonMap, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::mq;
use crate::note::add_note;
use crate::section::extract_section;
use crate::store::{Drive, DriveStore, Resolution};
use crate::Result;

/// The MCP service over a drive library.
pub struct DriveService {
    store: DriveStore,
    cwd: PathBuf,
}

impl DriveService {
    pub fn new(store: DriveStore, cwd: PathBuf) -> Self {
        Self { store, cwd }
    }

    /// Opens the service over the default library and working directory.
    pub fn open() -> Result<Self> {
        Ok(Self::new(
            DriveStore::open()?,
            std::env::current_dir()?,
        ))
    }

    fn resolve_required(&self, project: Option<&str>) -> AnyResult<Drive> {
        match self.store.resolve(project, &self.cwd) {
            Resolution::Found(drive) => Ok(drive),
            Resolution::Suggestions(names) => Err(anyhow!(
                "no drive matches '{}'. Available drives: {}",
                project.unwrap_or("(cwd)"),
                if names.is_empty() {
                    "(none)".to_string()
                } else {
                    names.join(", ")
                }
            )),
        }
    }

    fn get_context(&self, args: &JsonMap<String, Value>) -> AnyResult<CallToolResult> {
        let project = args.get("project").and_then(Value::as_str);

        let drive = match self.store.resolve(project, &self.cwd) {
            Resolution::Found(drive) => drive,
            Resolution::Suggestions(names) => {
                let listing = if names.is_empty() {
                    "(no drives installed)".to_string()
                } else {
                    names.join("\n- ")
                };
                return Ok(CallToolResult {
                    content: vec![Content::text(format!(
                        "No matching drive. Available drives:\n- {listing}"
                    ))],
                    structured_content: Some(json!({ "suggestions": names })),
                    is_error: Some(false),
                    meta: None,
                });
            }
        };

        let large = drive.is_large();
        let body = if large && mq::mq_available() {
            mq::mq_outline(&drive.path)?
        } else {
            drive.content()?
        };
        let text = format!("{}\n{body}", drive.header());

        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(json!({ "drive": drive.name, "large": large })),
            is_error: Some(false),
            meta: None,
        })
    }

    fn get_section(&self, args: &JsonMap<String, Value>) -> AnyResult<CallToolResult> {
        let project = required_str(args, "project")?;
        let file = required_str(args, "file")?;
        let section = required_str(args, "section")?;

        let drive = self.resolve_required(Some(project))?;
        let text = if mq::mq_available() {
            let path = match drive.kind {
                crate::store::DriveKind::File => drive.path.clone(),
                crate::store::DriveKind::Directory => drive.path.join(file),
            };
            mq::mq_section(&path, section)?
        } else {
            let content = self.store.read_document(&drive, file)?;
            extract_section(&content, section)?
        };

        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(json!({ "drive": drive.name, "section": section })),
            is_error: Some(false),
            meta: None,
        })
    }

    fn add_note(&self, args: &JsonMap<String, Value>) -> AnyResult<CallToolResult> {
        let project = required_str(args, "project")?;
        let title = required_str(args, "title")?;
        let content = required_str(args, "content")?;

        let drive = self.resolve_required(Some(project))?;
        let path = add_note(&drive, title, content)?;

        Ok(CallToolResult {
            content: vec![Content::text(format!(
                "Note added to drive '{}' at {}",
                drive.name,
                path.display()
            ))],
            structured_content: Some(json!({ "drive": drive.name, "path": path })),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Dispatches one tool call, folding errors into `Error: ...` text.
    pub fn dispatch(&self, name: &str, args: &JsonMap<String, Value>) -> CallToolResult {
        let result = match name {
            "get_context" => self.get_context(args),
            "get_section" => self.get_section(args),
            "add_note" => self.add_note(args),
            other => Err(anyhow!("unknown tool {other}")),
        };
        result.unwrap_or_else(|err| CallToolResult {
            content: vec![Content::text(format!("Error: {err}"))],
            structured_content: None,
            is_error: Some(true),
            meta: None,
        })
    }
}

fn required_str<'a>(args: &'a JsonMap<String, Value>, key: &str) -> AnyResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing required argument: {key}"))
}

fn object_schema(properties: Value, required: &[&str]) -> Arc<JsonMap<String, Value>> {
    let mut schema = JsonMap::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), properties);
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema.insert("additionalProperties".into(), json!(false));
    Arc::new(schema)
}

fn drive_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "get_context".into(),
            title: Some("Get project context".into()),
            description: Some(
                "Return the context drive for a project: full content, or a structural outline for large drives.".into(),
            ),
            input_schema: object_schema(
                json!({
                    "project": {
                        "type": "string",
                        "description": "Drive name or project path; defaults to the current directory"
                    }
                }),
                &[],
            ),
            output_schema: None,
            annotations: Some(ToolAnnotations::default()),
            icons: None,
        },
        Tool {
            name: "get_section".into(),
            title: Some("Get one section of a drive document".into()),
            description: Some(
                "Return a single heading's section from a drive file.".into(),
            ),
            input_schema: object_schema(
                json!({
                    "project": { "type": "string", "description": "Drive name or project path" },
                    "file": { "type": "string", "description": "Document file name within the drive" },
                    "section": { "type": "string", "description": "Heading text of the section" }
                }),
                &["project", "file", "section"],
            ),
            output_schema: None,
            annotations: Some(ToolAnnotations::default()),
            icons: None,
        },
        Tool {
            name: "add_note".into(),
            title: Some("Add a note to a drive".into()),
            description: Some(
                "Append a timestamped note to a drive, promoting file drives to directories.".into(),
            ),
            input_schema: object_schema(
                json!({
                    "project": { "type": "string", "description": "Drive name or project path" },
                    "title": { "type": "string", "description": "Note title" },
                    "content": { "type": "string", "description": "Note body (markdown)" }
                }),
                &["project", "title", "content"],
            ),
            output_schema: None,
            annotations: Some(ToolAnnotations::default()),
            icons: None,
        },
    ]
}

impl ServerHandler for DriveService {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, rmcp::ErrorData>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult {
            tools: drive_tools(),
            next_cursor: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<CallToolResult, rmcp::ErrorData>> + Send + '_
    {
        let args = request.arguments.clone().unwrap_or_default();
        let result = self.dispatch(request.name.as_ref(), &args);
        std::future::ready(Ok(result))
    }
}

/// Runs the server over stdio until the client disconnects.
pub fn serve_stdio(service: DriveService) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let running = rt.block_on(async {
        serve_server(service, rmcp::transport::stdio())
            .await
            .map_err(|e| anyhow!("failed to start server: {e}"))
    })?;
    rt.block_on(async {
        running
            .waiting()
            .await
            .map_err(|e| anyhow!("server task ended: {e}"))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn service(tmp: &tempfile::TempDir) -> DriveService {
        let drives = tmp.path().join("drives");
        fs::create_dir_all(&drives).unwrap();
        DriveService::new(
            DriveStore::new(drives, tmp.path().join("home")),
            tmp.path().to_path_buf(),
        )
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect()
    }

    fn args(pairs: &[(&str, &str)]) -> JsonMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn tool_listing_has_the_three_tools() {
        let tools = drive_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(names, vec!["get_context", "get_section", "add_note"]);
    }

    #[test]
    fn get_context_returns_header_then_content() {
        let tmp = tempdir().unwrap();
        let svc = service(&tmp);
        fs::write(
            svc.store.drives_dir().join("api.md"),
            "---\nname: api\ndescription: API notes\n---\n# Endpoints\n",
        )
        .unwrap();

        let result = svc.dispatch("get_context", &args(&[("project", "api")]));
        assert_eq!(result.is_error, Some(false));
        let text = text_of(&result);
        assert!(text.starts_with("---\n"));
        assert!(text.contains("name: api"));
        assert!(text.contains("# Endpoints"));
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["drive"], "api");
        assert_eq!(structured["large"], false);
    }

    #[test]
    fn get_context_with_unknown_project_lists_suggestions() {
        let tmp = tempdir().unwrap();
        let svc = service(&tmp);
        fs::write(svc.store.drives_dir().join("api.md"), "a\n").unwrap();
        fs::write(svc.store.drives_dir().join("web.md"), "w\n").unwrap();

        let result = svc.dispatch("get_context", &args(&[("project", "nope")]));
        let text = text_of(&result);
        assert!(text.contains("api"));
        assert!(text.contains("web"));
        assert_eq!(result.is_error, Some(false));
    }

    #[test]
    fn get_section_scenario() {
        let tmp = tempdir().unwrap();
        let svc = service(&tmp);
        let dir = svc.store.drives_dir().join("proj");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("arch.md"), "## Backend\n\nNode\n\n## Frontend\n\nReact\n").unwrap();

        let result = svc.dispatch(
            "get_section",
            &args(&[("project", "proj"), ("file", "arch.md"), ("section", "Backend")]),
        );
        let text = text_of(&result);
        assert!(text.contains("Node"));
        assert!(!text.contains("React"));
    }

    #[test]
    fn missing_required_args_yield_deterministic_errors() {
        let tmp = tempdir().unwrap();
        let svc = service(&tmp);

        let result = svc.dispatch("get_section", &args(&[("project", "proj")]));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            text_of(&result),
            "Error: missing required argument: file"
        );

        let result = svc.dispatch("add_note", &args(&[("project", "p"), ("title", "t")]));
        assert_eq!(
            text_of(&result),
            "Error: missing required argument: content"
        );
    }

    #[test]
    fn unknown_tools_error_as_text() {
        let tmp = tempdir().unwrap();
        let svc = service(&tmp);
        let result = svc.dispatch("explode", &JsonMap::new());
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).starts_with("Error: unknown tool"));
    }

    #[test]
    fn add_note_through_the_tool_surface() {
        let tmp = tempdir().unwrap();
        let svc = service(&tmp);
        fs::write(svc.store.drives_dir().join("api.md"), "# API\n").unwrap();

        let result = svc.dispatch(
            "add_note",
            &args(&[("project", "api"), ("title", "Rate limits"), ("content", "60 rpm")]),
        );
        assert_eq!(result.is_error, Some(false));
        assert!(text_of(&result).contains("Note added"));
        // Promotion happened.
        assert!(svc.store.drives_dir().join("api/overview.md").exists());
        assert!(svc.store.drives_dir().join("api/notes").is_dir());
    }
}
