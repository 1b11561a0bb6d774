//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

#[cfg(test)]
mod passing {
    use serde_json::json;

    use retcon::{FilterOp, Retcon, RetconSettings, StaticReferenceResolver, ReferencedEntity};

    use super::common::{apply, run_json};

    /// 空白输入原样返回，不做解析
    #[test]
    fn blank_input_passes_through() {
        let retcon = Retcon::default();
        assert_eq!(retcon.run("", &[FilterOp::new("remove", vec![json!("p")])]).unwrap().as_str(), "");
        assert_eq!(retcon.run("", &[]).unwrap().as_str(), "");
        assert_eq!(retcon.run_value(" \n", &json!(["explode"])).unwrap().as_str(), " \n");
    }

    /// 操作按顺序执行，只序列化一次
    #[test]
    fn ops_run_in_order() {
        let retcon = Retcon::default();
        let html = run_json(
            &retcon,
            r#"<p>Intro <script>track()</script><b>bold</b></p><p> </p>"#,
            json!([
                ["remove", "script"],
                ["change", "b", "strong"],
                ["removeEmpty"],
                ["attr", "p", {"class": "lead"}]
            ]),
        );
        assert_eq!(html, r#"<p class="lead">Intro <strong>bold</strong></p>"#);
    }

    /// 后一步看到前一步的结果
    #[test]
    fn later_ops_see_earlier_changes() {
        let retcon = Retcon::default();
        let html = run_json(
            &retcon,
            "<span>a</span><span>b</span>",
            json!([["wrap", "span", "div.x"], ["only", "div.x"]]),
        );
        assert_eq!(html, r#"<div class="x"><span>a</span></div><div class="x"><span>b</span></div>"#);
    }

    /// 模板风格的名称与普通名称等价
    #[test]
    fn template_aliases() {
        let retcon = Retcon::default();
        assert_eq!(
            apply(&retcon, "<p><i>x</i></p>", "retconChange", vec![json!("i"), json!("em")]),
            "<p><em>x</em></p>"
        );
        assert_eq!(apply(&retcon, "<p></p><p>y</p>", "retconRemoveEmpty", vec![]), "<p>y</p>");
    }

    /// 输出中没有文档外壳
    #[test]
    fn no_document_boilerplate() {
        let retcon = Retcon::default();
        let html = apply(
            &retcon,
            r#"<!DOCTYPE html><p title="<body>">x</p>"#,
            "attr",
            vec![json!("p"), json!({"id": "a"})],
        );
        assert_eq!(html, r#"<p title="<body>" id="a">x</p>"#);

        let text = apply(&retcon, "just text & more", "remove", vec![json!("p")]);
        assert_eq!(text, "just text &amp; more");
    }

    /// 表格片段不会被解析器丢弃
    #[test]
    fn table_fragments_survive() {
        let retcon = Retcon::default();
        assert_eq!(
            apply(&retcon, "<td>a</td><td>b</td>", "attr", vec![json!("td"), json!({"class": "c"})]),
            r#"<td class="c">a</td><td class="c">b</td>"#
        );
        assert_eq!(
            apply(&retcon, "<tr><td>a</td></tr>", "remove", vec![json!("span")]),
            "<tr><td>a</td></tr>"
        );
    }

    /// 表格单元格、选项与普通元素混排时顺序和内容都不变
    #[test]
    fn mixed_context_fragments_keep_order() {
        let retcon = Retcon::default();
        for html in [
            "<td>a</td><p>b</p>",
            "<p>b</p><td>a</td>",
            "<option>a</option><p>b</p>",
            "<tr><td>a</td></tr><div>x</div>",
            "<div>x</div><tr><td>a</td></tr>",
        ] {
            assert_eq!(apply(&retcon, html, "remove", vec![json!("span")]), html);
        }
        assert_eq!(
            apply(&retcon, "<td>a</td><p>b</p><td>c</td>", "change", vec![json!("p"), json!("div")]),
            "<td>a</td><div>b</div><td>c</td>"
        );
    }

    /// 不完整的标记不会报错
    #[test]
    fn malformed_markup_is_tolerated() {
        let retcon = Retcon::default();
        let html = apply(&retcon, "<div><p>open<span>bold</div>", "remove", vec![json!("span")]);
        assert_eq!(html, "<div><p>open</p></div>");
    }

    /// 没有匹配节点时结果不变
    #[test]
    fn no_match_is_a_no_op() {
        let retcon = Retcon::default();
        for (name, args) in [
            ("remove", vec![json!("video")]),
            ("change", vec![json!("video"), json!("div")]),
            ("wrap", vec![json!("video"), json!("div")]),
            ("unwrap", vec![json!("video")]),
            ("inject", vec![json!("video"), json!("x")]),
            ("attr", vec![json!("video"), json!({"a": "b"})]),
            ("renameAttr", vec![json!("p"), json!({})]),
            ("lazy", vec![json!("video")]),
        ] {
            assert_eq!(apply(&retcon, "<p>x</p>", name, args), "<p>x</p>", "{}", name);
        }
    }

    /// 选择器数组按文档顺序合并
    #[test]
    fn selector_arrays_union() {
        let retcon = Retcon::default();
        let html = apply(
            &retcon,
            "<h2>a</h2><p>b</p><h3>c</h3><ul><li>d</li></ul>",
            "only",
            vec![json!(["h3", "h2"])],
        );
        assert_eq!(html, "<h2>a</h2><h3>c</h3>");
    }

    /// 输出中的引用令牌被解析
    #[test]
    fn references_resolved_in_output() {
        let retcon = Retcon::default().with_resolver(StaticReferenceResolver::new(vec![ReferencedEntity {
            element_type: "entry".to_string(),
            id: "7".to_string(),
            url: Some("https://example.com/about".to_string()),
            ..Default::default()
        }]));
        let html = apply(
            &retcon,
            r#"<a href="{entry:7:url}">About</a> <a href="{entry:8||/missing}">Gone</a>"#,
            "attr",
            vec![json!("a"), json!({"rel": "next"})],
        );
        assert_eq!(
            html,
            r#"<a href="https://example.com/about" rel="next">About</a> <a href="/missing" rel="next">Gone</a>"#
        );

        let settings = RetconSettings {
            parse_refs: false,
            ..Default::default()
        };
        let raw = Retcon::new(settings);
        assert_eq!(
            apply(&raw, r#"<a href="{entry:7}">x</a>"#, "remove", vec![json!("b")]),
            r#"<a href="{entry:7}">x</a>"#
        );
    }

    /// 同一个实例可以重复使用
    #[test]
    fn instance_is_reusable() {
        let retcon = Retcon::default();
        for _ in 0..3 {
            assert_eq!(apply(&retcon, "<b>hi</b>", "change", vec![json!("b"), json!(false)]), "hi");
        }
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use serde_json::json;

    use retcon::{ErrorCategory, FilterOp, Retcon, RetconError};

    /// 没有操作时报错
    #[test]
    fn missing_operations() {
        let retcon = Retcon::default();
        for html in ["<p>x</p>", "text"] {
            let error = retcon.run(html, &[]).unwrap_err();
            assert!(matches!(error, RetconError::MissingOperation));
            assert_eq!(error.to_string(), "No filter operation specified");
        }
        assert!(matches!(
            retcon.run_value("<p>x</p>", &json!(null)),
            Err(RetconError::MissingOperation)
        ));
    }

    /// 未知操作在解析前报错，错误信息包含名称
    #[test]
    fn unknown_operation() {
        let retcon = Retcon::default();
        let error = retcon
            .run(
                "<p>x</p>",
                &[
                    FilterOp::new("remove", vec![json!("p")]),
                    FilterOp::new("retcon", vec![]),
                ],
            )
            .unwrap_err();
        assert_eq!(error.to_string(), "Retcon filter \"retcon\" does not exist");
        assert_eq!(error.category(), ErrorCategory::InvalidPipeline);
    }

    /// 参数类型错误
    #[test]
    fn invalid_arguments() {
        let retcon = Retcon::default();
        let error = retcon.apply("<p>x</p>", "remove", vec![]).unwrap_err();
        assert!(error.to_string().contains("\"remove\""));

        let error = retcon
            .apply("<p>x</p>", "attr", vec![json!("p"), json!("class=x")])
            .unwrap_err();
        assert!(matches!(error, RetconError::InvalidArgument { .. }));

        assert!(retcon.apply("<p>x</p>", "change", vec![json!("p"), json!("two words")]).is_err());
    }

    /// 本地变换缺少配置时报告缺失的设置项
    #[test]
    fn transform_without_settings() {
        let retcon = Retcon::default();
        let error = retcon
            .apply(r#"<img src="/a.png">"#, "transform", vec![json!({"width": 100})])
            .unwrap_err();
        assert_eq!(error.category(), ErrorCategory::Configuration);
        assert!(error.to_string().contains("base_transform_path"));
    }
}
