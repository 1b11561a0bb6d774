//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use std::fs;

    use assert_cmd::Command;

    fn retcon() -> Command {
        let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
        cmd.env_remove("RETCON_CONFIG").env_remove("RETCON_LOG_LEVEL");
        cmd
    }

    /// 从标准输入读取，结果写到标准输出
    #[test]
    fn filters_stdin() {
        retcon()
            .args(["--filter", r#"["remove", "script"]"#])
            .write_stdin("<p>a<script>x()</script></p>")
            .assert()
            .success()
            .stdout("<p>a</p>");
    }

    /// 管道文件先于 --filter 执行
    #[test]
    fn pipeline_file_then_filters() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.html");
        let pipeline = dir.path().join("ops.json");
        let output = dir.path().join("out.html");
        fs::write(&input, "<p><b>x</b></p><p></p>").unwrap();
        fs::write(&pipeline, r#"[["change", "b", "strong"]]"#).unwrap();

        retcon()
            .arg("-i")
            .arg(&input)
            .arg("-p")
            .arg(&pipeline)
            .args(["-f", "removeEmpty", "-o"])
            .arg(&output)
            .assert()
            .success()
            .stdout("");

        assert_eq!(fs::read_to_string(&output).unwrap(), "<p><strong>x</strong></p>");
    }

    /// 列出环境变量
    #[test]
    fn env_docs() {
        let output = retcon().arg("--env-docs").output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("RETCON_LOG_LEVEL"));
        assert!(stdout.contains("RETCON_BASE_TRANSFORM_PATH"));
    }

    /// 生成示例配置
    #[test]
    fn init_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retcon.toml");
        retcon()
            .arg("--init-config")
            .arg(&path)
            .assert()
            .success();
        assert!(fs::read_to_string(&path).unwrap().contains("base_transform_path"));
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
    use assert_cmd::Command;

    fn retcon() -> Command {
        let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
        cmd.env_remove("RETCON_CONFIG").env_remove("RETCON_LOG_LEVEL");
        cmd
    }

    /// 没有任何操作时以 2 退出
    #[test]
    fn missing_operation() {
        retcon().write_stdin("<p>x</p>").assert().code(2);
    }

    /// 未知过滤器以 2 退出并给出名称
    #[test]
    fn unknown_filter() {
        let output = retcon()
            .args(["--filter", "explode"])
            .write_stdin("<p>x</p>")
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("\"explode\" does not exist"));
    }

    /// 无效的 JSON 参数
    #[test]
    fn invalid_filter_json() {
        retcon()
            .args(["--filter", r#"["remove", "#])
            .write_stdin("<p>x</p>")
            .assert()
            .code(2);
    }

    /// 缺少图片配置时以 3 退出
    #[test]
    fn missing_image_settings() {
        retcon()
            .env_remove("RETCON_BASE_TRANSFORM_PATH")
            .args(["--filter", r#"["transform", {"width": 10}]"#])
            .write_stdin(r#"<img src="/a.png">"#)
            .assert()
            .code(3);
    }
}
