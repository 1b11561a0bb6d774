//! 基础DOM操作
//!
//! 基于 `markup5ever_rcdom` 的节点读取、创建、移动和深拷贝。
//! 所有变更都通过显式的父/子替换完成，不依赖迭代器的稳定性。

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::{format_tendril, StrTendril};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData};

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 检查节点是否带有指定属性
pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .any(|attr| &*attr.name.local == attr_name),
        _ => false,
    }
}

/// 获取节点的全部属性（保持原有顺序）
pub fn get_node_attrs(node: &Handle) -> Vec<Attribute> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs.borrow().clone(),
        _ => Vec::new(),
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取父节点
///
/// `parent` 是 `Cell<Option<Weak>>`，读取后必须放回，否则节点会丢失与父节点的关联。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    let _ = &attrs_mut[i].value.clear();
                    let _ = &attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            // Add new attribute (since originally the target node didn't have it)
            if let Some(attr_value) = attr_value {
                attrs_mut.push(create_attribute(attr_name, &attr_value));
            }
        }
    };
}

/// 创建属性
pub fn create_attribute(attr_name: &str, attr_value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
        value: format_tendril!("{}", attr_value),
    }
}

/// 创建新的HTML元素节点（尚未挂载）
pub fn create_element(tag_name: &str, attrs: Vec<Attribute>) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag_name.to_ascii_lowercase())),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建文本节点（尚未挂载）
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 深拷贝节点及其全部子树，返回的新节点没有父节点
pub fn deep_clone(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(template_contents.borrow().as_ref().map(deep_clone)),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => {
            NodeData::ProcessingInstruction {
                target: target.clone(),
                contents: contents.clone(),
            }
        }
    };

    let copy = Node::new(data);
    for child in node.children.borrow().iter() {
        append_child(&copy, deep_clone(child));
    }
    copy
}

/// 将节点从父节点中摘除；没有父节点时什么也不做
pub fn detach_node(node: &Handle) {
    let weak = node.parent.take();
    if let Some(parent) = weak.and_then(|parent| parent.upgrade()) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

/// 追加子节点（会先把子节点从原位置摘除）
pub fn append_child(parent: &Handle, child: Handle) {
    detach_node(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 依次追加多个子节点
pub fn append_children(parent: &Handle, children: Vec<Handle>) {
    for child in children {
        append_child(parent, child);
    }
}

/// 取出节点的全部子节点，得到一个游离的“片段”
pub fn take_children(node: &Handle) -> Vec<Handle> {
    let children = std::mem::take(&mut *node.children.borrow_mut());
    for child in children.iter() {
        child.parent.set(None);
    }
    children
}

/// 用一组节点替换目标节点，保持其在父节点中的位置
///
/// 返回 `false` 表示目标节点已经游离，未做任何修改。
pub fn replace_node(target: &Handle, replacements: Vec<Handle>) -> bool {
    let Some(parent) = get_parent_node(target) else {
        return false;
    };

    for replacement in replacements.iter() {
        detach_node(replacement);
    }

    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|child| Rc::ptr_eq(child, target)) else {
        return false;
    };

    for replacement in replacements.iter() {
        replacement.parent.set(Some(Rc::downgrade(&parent)));
    }
    children.splice(index..=index, replacements);
    drop(children);

    target.parent.set(None);
    true
}

/// 判断 `node` 是否仍挂载在 `root` 之下
pub fn is_descendant_of(node: &Handle, root: &Handle) -> bool {
    let mut current = get_parent_node(node);
    while let Some(parent) = current {
        if Rc::ptr_eq(&parent, root) {
            return true;
        }
        current = get_parent_node(&parent);
    }
    false
}

/// 获取节点的文本内容（所有后代文本节点按文档顺序拼接）
pub fn get_text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, text: &mut String) {
    match &node.data {
        NodeData::Text { contents } => text.push_str(&contents.borrow()),
        NodeData::Element {
            template_contents, ..
        } => {
            if let Some(contents) = template_contents.borrow().as_ref() {
                collect_text(contents, text);
            }
            for child in node.children.borrow().iter() {
                collect_text(child, text);
            }
        }
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, text);
            }
        }
    }
}

/// 用单个文本节点替换节点的全部内容
pub fn set_text_content(node: &Handle, text: &str) {
    drop(take_children(node));
    if !text.is_empty() {
        append_child(node, create_text_node(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_survives_lookup() {
        let parent = create_element("div", vec![]);
        let child = create_element("span", vec![]);
        append_child(&parent, child.clone());

        assert!(get_parent_node(&child).is_some());
        // Reading the parent twice must not clear the link
        assert!(get_parent_node(&child).is_some());
    }

    #[test]
    fn replace_keeps_position() {
        let parent = create_element("div", vec![]);
        let a = create_element("a", vec![]);
        let b = create_element("b", vec![]);
        let c = create_element("i", vec![]);
        append_children(&parent, vec![a.clone(), b.clone(), c.clone()]);

        let x = create_element("em", vec![]);
        let y = create_element("strong", vec![]);
        assert!(replace_node(&b, vec![x.clone(), y.clone()]));

        let names: Vec<String> = parent
            .children
            .borrow()
            .iter()
            .map(|child| get_node_name(child).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "em", "strong", "i"]);
        assert!(get_parent_node(&b).is_none());
        assert!(Rc::ptr_eq(&get_parent_node(&y).unwrap(), &parent));
    }

    #[test]
    fn deep_clone_is_independent() {
        let original = create_element("p", vec![create_attribute("class", "x")]);
        append_child(&original, create_text_node("hello"));

        let copy = deep_clone(&original);
        set_node_attr(&copy, "class", Some("y".to_string()));
        set_text_content(&copy, "bye");

        assert_eq!(get_node_attr(&original, "class"), Some("x".to_string()));
        assert_eq!(get_text_content(&original), "hello");
        assert_eq!(get_text_content(&copy), "bye");
    }

    #[test]
    fn set_node_attr_removes_with_none() {
        let node = create_element("img", vec![create_attribute("alt", "a")]);
        set_node_attr(&node, "alt", None);
        assert!(!has_node_attr(&node, "alt"));
    }
}
