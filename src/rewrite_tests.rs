//! Rewrite Transformer behaviour over whole templates
//!
//! - Confirmed zero-positional invocations become tags with `@` arguments
//! - Unconfirmed names, positional calls and builtins are left byte-identical
//! - Instrumented and original source rewrite to the same output

#[cfg(test)]
mod tests {
    use crate::ast::{AttrValue, Expression, Statement};
    use crate::classify::RESERVED_BUILTINS;
    use crate::instrument::instrument_template;
    use crate::parse::parse_template;
    use crate::print::print_template;
    use crate::rewrite::rewrite_template;
    use crate::runtime::{probe, UsageRecorder};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeSet, HashSet};

    const IDENTITY: &str = "app/templates/index.hbs";

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn rewrite(source: &str, confirmed: &[&str]) -> (String, usize) {
        let output = rewrite_template(parse_template(source, IDENTITY).unwrap(), &names(confirmed));
        (print_template(&output.template).unwrap(), output.changes)
    }

    #[test]
    fn test_confirmed_inline_invocation_becomes_self_closing_tag() {
        let source = "{{user-card title=this.title subtitle=(upper @sub)}}";
        let output = rewrite_template(parse_template(source, IDENTITY).unwrap(), &names(&["user-card"]));
        assert_eq!(output.changes, 1);

        let Statement::Element(element) = &output.template.body[0] else {
            panic!("expected a tag, got {:?}", output.template.body[0]);
        };
        assert_eq!(element.tag, "UserCard");
        assert!(element.self_closing);
        assert!(element.children.is_empty());

        let attrs: Vec<(&str, &Expression)> = element
            .attributes
            .iter()
            .map(|attr| match &attr.value {
                AttrValue::Mustache(m) => (attr.name.as_str(), &m.path),
                other => panic!("unexpected attribute value {:?}", other),
            })
            .collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].0, "@title");
        assert_eq!(attrs[1].0, "@subtitle");

        let parsed = parse_template(source, IDENTITY).unwrap();
        let Statement::Mustache(original) = &parsed.body[0] else {
            panic!("expected a mustache");
        };
        assert_eq!(attrs[0].1, &original.hash.pairs[0].value);
        assert_eq!(attrs[1].1, &original.hash.pairs[1].value);

        assert_eq!(
            print_template(&output.template).unwrap(),
            "<UserCard @title={{this.title}} @subtitle={{(upper @sub)}} />"
        );
    }

    #[test]
    fn test_unconfirmed_names_are_byte_identical() {
        let sources = [
            "{{user-card title=this.title}}",
            "{{#bar baz=1}}hi{{/bar}}",
            "<p>{{  spaced-out   a=1  }}</p>\n",
        ];
        for source in sources {
            assert_eq!(rewrite(source, &["something-else"]), (source.to_string(), 0));
            assert_eq!(rewrite(source, &[]), (source.to_string(), 0));
        }
    }

    #[test]
    fn test_positional_arguments_block_rewriting() {
        let sources = [
            "{{foo bar}}",
            "{{foo \"x\" k=1}}",
            "{{#foo this.items}}row{{/foo}}",
        ];
        for source in sources {
            assert_eq!(rewrite(source, &["foo"]), (source.to_string(), 0));
        }
    }

    #[test]
    fn test_builtins_are_never_rewritten() {
        let all: Vec<&str> = RESERVED_BUILTINS.iter().copied().collect();
        for name in &all {
            for source in [
                format!("{{{{{}}}}}", name),
                format!("{{{{{} k=1}}}}", name),
                format!("{{{{#{}}}}}body{{{{/{}}}}}", name, name),
            ] {
                assert_eq!(rewrite(&source, &all), (source.clone(), 0));
            }
        }
    }

    #[test]
    fn test_whitespace_control_blocks_rewriting() {
        let sources = [
            "a   {{~foo~}}   b",
            "a {{foo~}}\n",
            "{{~#foo}}hi{{/foo}}",
            "{{#foo~}}  hi  {{~/foo}}",
        ];
        for source in sources {
            assert_eq!(rewrite(source, &["foo"]), (source.to_string(), 0));

            let instrumented = print_template(
                &instrument_template(parse_template(source, IDENTITY).unwrap()).template,
            )
            .unwrap();
            assert_eq!(rewrite(&instrumented, &["foo"]), (source.to_string(), 0));
        }
    }

    #[test]
    fn test_names_with_empty_words_keep_curly_form() {
        assert_eq!(
            rewrite("{{-private}} {{private}} {{a--b}}", &["-private", "private", "a--b"]),
            ("{{-private}} <Private /> {{a--b}}".to_string(), 1)
        );
    }

    #[test]
    fn test_instrumented_source_rewrites_like_original() {
        let source = "<main>\n  {{site-header}}\n  {{#panel-box title=\"x\" as |p|}}{{p.body}}{{/panel-box}}\n</main>";
        let instrumented = print_template(
            &instrument_template(parse_template(source, IDENTITY).unwrap()).template,
        )
        .unwrap();
        assert_ne!(instrumented, source);

        let confirmed = ["site-header", "panel-box"];
        let expected = "<main>\n  <SiteHeader />\n  <PanelBox @title={{\"x\"}} as |p|>\n{{p.body}}</PanelBox>\n</main>";
        assert_eq!(rewrite(source, &confirmed).0, expected);
        assert_eq!(rewrite(&instrumented, &confirmed).0, expected);
    }

    #[test]
    fn test_rewritten_output_reparses() {
        let (code, changes) = rewrite(
            "{{#x-list items=@items as |item idx|}}<li>{{item}} {{idx}}</li>{{/x-list}}{{ui/x-button label=\"go\"}}",
            &["x-list", "ui/x-button"],
        );
        assert_eq!(changes, 2);
        assert_eq!(
            code,
            "<XList @items={{@items}} as |item idx|>\n<li>{{item}} {{idx}}</li></XList><Ui::XButton @label={{\"go\"}} />"
        );
        let reparsed = parse_template(&code, IDENTITY).unwrap();
        assert_eq!(print_template(&reparsed).unwrap(), code);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let source = "{{foo}}\n{{#bar baz=1}}hi{{/bar}}";

        let instrumented = instrument_template(parse_template(source, IDENTITY).unwrap());
        assert_eq!(instrumented.changes, 2);
        let instrumented_code = print_template(&instrumented.template).unwrap();

        // the application renders both probes once; only `foo` is a component
        let registry: HashSet<String> = ["foo".to_string()].into_iter().collect();
        let recorder = UsageRecorder::new();
        for name in ["foo", "bar"] {
            probe(&registry, &recorder, name, IDENTITY);
        }
        let telemetry = recorder.flush();
        assert_eq!(telemetry.confirmed_for(IDENTITY), &names(&["foo"]));

        let output = rewrite_template(
            parse_template(&instrumented_code, IDENTITY).unwrap(),
            telemetry.confirmed_for(IDENTITY),
        );
        assert_eq!(output.changes, 1);
        assert_eq!(
            print_template(&output.template).unwrap(),
            "<Foo />\n{{#bar baz=1}}hi{{/bar}}"
        );
    }
}
