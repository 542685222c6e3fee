//! 模型输出容错提取
//!
//! 模型返回的「JSON」常夹带说明文字、Markdown 围栏、尾逗号或未转义换行。
//! 这里提供两层工具：定位 JSON 片段（围栏 / 首个 `{` 到末个 `}`），以及在严格解码失败时
//! 按括号配平切分对象、用正则按键提取字符串与扁平参数。嵌套参数结构不在支持范围内。

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

/// 取 ```json 围栏内的内容；没有围栏时返回 None
pub fn strip_json_fence(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    let inner = rest[..end].trim();
    (!inner.is_empty()).then_some(inner)
}

/// 从首个 `{` 截到末个 `}`；找不到成对花括号时返回 None
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 先尝试围栏，再尝试花括号范围，都失败则返回原文
pub fn locate_json(text: &str) -> &str {
    strip_json_fence(text)
        .or_else(|| extract_json_object(text))
        .unwrap_or(text)
}

/// 找到 `open_at` 处开括号对应的闭括号位置（跳过字符串字面量内的括号）
pub fn find_matching(text: &str, open_at: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open_at) != Some(&open) {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open_at) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// 把数组体切分为顶层对象片段（每段含首尾花括号）
pub fn split_top_level_objects(body: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut pos = 0;
    while let Some(offset) = body[pos..].find('{') {
        let start = pos + offset;
        match find_matching(body, start, b'{', b'}') {
            Some(end) => {
                objects.push(&body[start..=end]);
                pos = end + 1;
            }
            None => break,
        }
    }
    objects
}

/// `"key": [ ... ]` 的数组体（不含方括号）
pub fn extract_array_body<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let key_at = json.find(&format!("\"{key}\""))?;
    let open = key_at + json[key_at..].find('[')?;
    let close = find_matching(json, open, b'[', b']')?;
    Some(&json[open + 1..close])
}

/// `"key": { ... }` 的对象体（不含花括号）
pub fn extract_object_body<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let key_at = json.find(&format!("\"{key}\""))?;
    let open = key_at + json[key_at..].find('{')?;
    let close = find_matching(json, open, b'{', b'}')?;
    Some(&json[open + 1..close])
}

/// 按键提取首个字符串值并反转义
pub fn extract_string_field(json: &str, key: &str) -> Option<String> {
    let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    let raw = re.captures(json)?.get(1)?.as_str();
    Some(unescape(raw))
}

/// 扁平参数：字符串 / 布尔 / 数字 / null 值，忽略嵌套结构
pub fn extract_flat_parameters(object_body: &str) -> HashMap<String, Value> {
    let mut parameters = HashMap::new();
    let Ok(re) = Regex::new(
        r#""([^"\\]+)"\s*:\s*("(?:[^"\\]|\\.)*"|true|false|null|-?\d+(?:\.\d+)?)"#,
    ) else {
        return parameters;
    };
    for caps in re.captures_iter(object_body) {
        let (Some(key), Some(raw)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let raw = raw.as_str();
        let value = if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
            Value::String(unescape(inner))
        } else {
            serde_json::from_str(raw).unwrap_or(Value::Null)
        };
        if value.is_null() {
            continue;
        }
        parameters.insert(key.as_str().trim().to_string(), value);
    }
    parameters
}

/// 优先按 JSON 规则反转义；原文含未转义控制字符时退回逐个替换
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| {
        raw.replace("\\n", "\n")
            .replace("\\t", "\t")
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
    })
}
