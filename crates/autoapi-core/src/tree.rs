//! Apifox folder tree and output file grouping.
//!
//! Generated files mirror the project's folder tree: every folder that directly
//! holds operations gets its own function and interface file, under a path made
//! of the transliterated folder names.

// Internal imports (std, crate)
use std::fmt;

use crate::naming::transliterate;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Node type tag of a folder
pub const FOLDER: &str = "apiDetailFolder";

/// Node type tag of an operation
pub const OPERATION: &str = "apiDetail";

/// Operation summary carried by tree leaves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTreeLeaf {
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiTreeNode {
    pub key: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub node_type: String,

    #[serde(default)]
    pub children: Vec<ApiTreeNode>,

    #[serde(default)]
    pub api: Option<ApiTreeLeaf>,
}

impl ApiTreeNode {
    pub fn is_folder(&self) -> bool {
        self.node_type == FOLDER
    }

    pub fn is_operation(&self) -> bool {
        self.node_type == OPERATION && self.api.is_some()
    }
}

/// How a target group's files are brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateScope {
    /// Every operation of the folder is regenerated; files are rewritten whole
    FullReplace,
    /// A subset of the folder is regenerated; declarations are merged in place
    Incremental,
}

impl fmt::Display for UpdateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullReplace => write!(f, "full replace"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// Operations that share one pair of output files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Directory relative to the output root, e.g. `apifox/yongHu`
    pub path: String,
    pub operations: Vec<ApiTreeLeaf>,
    pub scope: UpdateScope,
}

impl TargetGroup {
    /// Groups covering every folder under every root
    pub fn all(roots: &[ApiTreeNode], root_name: &str) -> Vec<TargetGroup> {
        let mut groups = Vec::new();
        let mut loose = Vec::new();
        for root in roots {
            if root.is_folder() {
                collect_folder(root, vec![root_name.to_string(), folder_segment(&root.name)], &mut groups);
            } else if let Some(api) = root.api.as_ref().filter(|_| root.is_operation()) {
                loose.push(api.clone());
            }
        }
        if !loose.is_empty() {
            groups.insert(
                0,
                TargetGroup {
                    path: root_name.to_string(),
                    operations: loose,
                    scope: UpdateScope::FullReplace,
                },
            );
        }
        groups
    }

    pub fn operation_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.operations.iter().map(|op| op.id)
    }
}

/// One directory name for a folder: transliterated, with path separators
/// removed and `.`/`..` segments dropped so it stays below the output root
pub fn folder_segment(name: &str) -> String {
    let joined: String = transliterate(name)
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect();
    let trimmed = joined.trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolve the groups selected by a tree key.
///
/// Selecting a folder yields one full-replace group per folder below it that
/// directly holds operations. Selecting an operation yields one incremental
/// group containing only that operation. Unknown keys yield nothing.
pub fn collect_targets(roots: &[ApiTreeNode], key: &str, root_name: &str) -> Vec<TargetGroup> {
    let mut path = vec![root_name.to_string()];
    for root in roots {
        if let Some(groups) = find_and_collect(root, key, &mut path) {
            return groups;
        }
    }
    Vec::new()
}

fn find_and_collect(node: &ApiTreeNode, key: &str, path: &mut Vec<String>) -> Option<Vec<TargetGroup>> {
    if node.is_folder() {
        path.push(folder_segment(&node.name));
    }

    if node.key == key {
        let mut groups = Vec::new();
        if node.is_folder() {
            collect_folder(node, path.clone(), &mut groups);
        } else if let Some(api) = node.api.as_ref().filter(|_| node.is_operation()) {
            groups.push(TargetGroup {
                path: path.join("/"),
                operations: vec![api.clone()],
                scope: UpdateScope::Incremental,
            });
        }
        return Some(groups);
    }

    for child in &node.children {
        if let Some(groups) = find_and_collect(child, key, path) {
            return Some(groups);
        }
    }

    if node.is_folder() {
        path.pop();
    }
    None
}

fn collect_folder(folder: &ApiTreeNode, base: Vec<String>, groups: &mut Vec<TargetGroup>) {
    let slot = groups.len();
    let mut operations = Vec::new();

    for child in &folder.children {
        if child.is_operation() {
            if let Some(api) = &child.api {
                operations.push(api.clone());
            }
        } else if child.is_folder() {
            let mut child_path = base.clone();
            child_path.push(folder_segment(&child.name));
            collect_folder(child, child_path, groups);
        }
    }

    if !operations.is_empty() {
        groups.insert(
            slot,
            TargetGroup {
                path: base.join("/"),
                operations,
                scope: UpdateScope::FullReplace,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Vec<ApiTreeNode> {
        serde_json::from_value(json!([
            {
                "key": "apiDetailFolder.1",
                "name": "用户",
                "type": "apiDetailFolder",
                "children": [
                    {
                        "key": "apiDetail.10",
                        "name": "Get user",
                        "type": "apiDetail",
                        "api": { "id": 10, "name": "Get user", "method": "get", "path": "/user/{id}" }
                    },
                    {
                        "key": "apiDetailFolder.2",
                        "name": "订单",
                        "type": "apiDetailFolder",
                        "children": [
                            {
                                "key": "apiDetail.20",
                                "name": "List orders",
                                "type": "apiDetail",
                                "api": { "id": 20, "method": "get", "path": "/user/{id}/orders" }
                            },
                            {
                                "key": "apiDetail.21",
                                "name": "Create order",
                                "type": "apiDetail",
                                "api": { "id": 21, "method": "post", "path": "/orders" }
                            }
                        ]
                    },
                    {
                        "key": "apiDetailFolder.3",
                        "name": "Empty",
                        "type": "apiDetailFolder",
                        "children": []
                    }
                ]
            },
            {
                "key": "apiDetail.30",
                "name": "Ping",
                "type": "apiDetail",
                "api": { "id": 30, "method": "get", "path": "/ping" }
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_folder_selection_groups_each_folder() {
        let groups = collect_targets(&tree(), "apiDetailFolder.1", "apifox");
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].path, "apifox/yongHu");
        assert_eq!(groups[0].operation_ids().collect::<Vec<_>>(), vec![10]);
        assert_eq!(groups[0].scope, UpdateScope::FullReplace);

        assert_eq!(groups[1].path, "apifox/yongHu/dingDan");
        assert_eq!(groups[1].operation_ids().collect::<Vec<_>>(), vec![20, 21]);
    }

    #[test]
    fn test_operation_selection_is_incremental() {
        let groups = collect_targets(&tree(), "apiDetail.21", "apifox");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].path, "apifox/yongHu/dingDan");
        assert_eq!(groups[0].operation_ids().collect::<Vec<_>>(), vec![21]);
        assert_eq!(groups[0].scope, UpdateScope::Incremental);
    }

    #[test]
    fn test_sibling_folder_path_is_restored() {
        let groups = collect_targets(&tree(), "apiDetail.30", "apifox");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].path, "apifox");
    }

    #[test]
    fn test_unknown_key_and_empty_folder() {
        assert!(collect_targets(&tree(), "nope", "apifox").is_empty());
        assert!(collect_targets(&tree(), "apiDetailFolder.3", "apifox").is_empty());
    }

    #[test]
    fn test_folder_segment_stays_below_root() {
        assert_eq!(folder_segment("../../x"), "x");
        assert_eq!(folder_segment("a/b\\c"), "abc");
        assert_eq!(folder_segment(".."), "_");
        assert_eq!(folder_segment("Users"), "Users");

        let roots: Vec<ApiTreeNode> = serde_json::from_value(json!([{
            "key": "apiDetailFolder.9", "name": "../../etc", "type": "apiDetailFolder",
            "children": [
                { "key": "apiDetail.1", "name": "a", "type": "apiDetail", "api": { "id": 1, "method": "get", "path": "/a" } }
            ]
        }]))
        .unwrap();
        let groups = collect_targets(&roots, "apiDetailFolder.9", "apifox");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].path, "apifox/etc");
        assert!(!groups[0].path.contains(".."));
    }

    #[test]
    fn test_all_groups() {
        let groups = TargetGroup::all(&tree(), "apifox");
        let paths: Vec<_> = groups.iter().map(|g| g.path.as_str()).collect();
        assert_eq!(paths, vec!["apifox", "apifox/yongHu", "apifox/yongHu/dingDan"]);
        assert!(groups.iter().all(|g| g.scope == UpdateScope::FullReplace));
    }
}
