use plotly::common::Mode;
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};

/// Plot accuracy against the number of completed queries.
///
/// Point 0 is the seed model; point `i` is the model after `i` labels.
pub fn plot_accuracy_curve(accuracy: &[f32], title: &str) -> Plot {
    let queries: Vec<usize> = (0..accuracy.len()).collect();
    let trace = Scatter::new(queries, accuracy.to_vec())
        .mode(Mode::LinesMarkers)
        .name("Accuracy");

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Number of Queries"))
        .y_axis(
            Axis::new()
                .title("Accuracy")
                .range(vec![0.0, 1.0]),
        );

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}
