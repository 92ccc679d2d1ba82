// ============================================================
// Layer 5 — Feature Networks
// ============================================================
// The trainable vector → vector functions wrapped by the
// Encoder and Decoder. The VAE never looks inside them; it only
// needs `FeatureTransform`:
//
//   transform(batch [N, in]) → batch [N, out]
//
// Three concrete networks are provided, collected in the tagged
// variant `FeatureNet` so Encoder/Decoder stay non-generic:
//
//   Mlp          Linear → ReLU → Linear
//                (grey MNIST and synthetic data)
//
//   ConvEncoder  [N, H*W*C] → NCHW → 3 × (Conv2d s2 + ReLU)
//                → flatten → Linear
//
//   ConvDecoder  Linear + ReLU → [N, 4f, s, s]
//                → 3 × ConvTranspose2d s2 (ReLU between)
//                → channels-last flatten [N, H*W*C]
//
// Spatial sizes with kernel 3, stride 2, padding 1:
//   encoder   28 → 14 → 7 → 4
//   decoder    4 → 7 → 14 → 28   (output padding 0, 1, 1)
// The decoder picks each output padding so its sizes mirror the
// encoder's exactly for any square image size.
//
// Reference: Burn Book §3 (Building Blocks)
//            Kingma & Welling (2014) Auto-Encoding Variational Bayes

use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation::relu, backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::VaeError;
use crate::domain::sample::DatasetKind;

// ─── FeatureTransform ─────────────────────────────────────────────────────────
/// A trainable batch transform with fixed input and output widths.
pub trait FeatureTransform<B: Backend> {
    /// Map a [batch, input_width] tensor to [batch, output_width].
    fn transform(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;

    fn input_width(&self) -> usize;

    fn output_width(&self) -> usize;
}

// ─── GradSquaredNorm ──────────────────────────────────────────────────────────
/// Sum of squared gradient entries over every trainable parameter.
/// Used by the trainer to detect NaN/Inf before an update.
pub trait GradSquaredNorm<B: AutodiffBackend> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64;
}

fn param_squared_norm<B: AutodiffBackend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    grads: &B::Gradients,
) -> f64 {
    param
        .val()
        .grad(grads)
        .map(|g| (g.clone() * g).sum().into_scalar().elem::<f64>())
        .unwrap_or(0.0)
}

fn bias_squared_norm<B: AutodiffBackend>(
    bias:  &Option<Param<Tensor<B, 1>>>,
    grads: &B::Gradients,
) -> f64 {
    bias.as_ref().map(|b| param_squared_norm(b, grads)).unwrap_or(0.0)
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for Linear<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        param_squared_norm(&self.weight, grads) + bias_squared_norm(&self.bias, grads)
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for Conv2d<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        param_squared_norm(&self.weight, grads) + bias_squared_norm(&self.bias, grads)
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for ConvTranspose2d<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        param_squared_norm(&self.weight, grads) + bias_squared_norm(&self.bias, grads)
    }
}

// ─── Architecture ─────────────────────────────────────────────────────────────
/// Which encoder/decoder pair to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Mlp,
    Conv,
}

impl Architecture {
    /// Colour images get the convolutional pair, everything else the MLP.
    pub fn for_dataset(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::MnistColor => Architecture::Conv,
            DatasetKind::MnistBw | DatasetKind::Synthetic => Architecture::Mlp,
        }
    }
}

// ─── Mlp ──────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct MlpConfig {
    pub input_width:  usize,
    pub hidden_width: usize,
    pub output_width: usize,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        Mlp {
            hidden:       LinearConfig::new(self.input_width, self.hidden_width).init(device),
            output:       LinearConfig::new(self.hidden_width, self.output_width).init(device),
            input_width:  self.input_width,
            output_width: self.output_width,
        }
    }
}

/// One hidden ReLU layer followed by a linear projection.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    pub hidden:   Linear<B>,
    pub output:   Linear<B>,
    input_width:  usize,
    output_width: usize,
}

impl<B: Backend> FeatureTransform<B> for Mlp<B> {
    fn transform(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.output.forward(relu(self.hidden.forward(input)))
    }

    fn input_width(&self) -> usize { self.input_width }

    fn output_width(&self) -> usize { self.output_width }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for Mlp<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        self.hidden.grad_squared_norm(grads) + self.output.grad_squared_norm(grads)
    }
}

// ─── Convolution geometry ─────────────────────────────────────────────────────
/// Output size of a kernel-3, stride-2, padding-1 convolution.
fn conv_out(size: usize) -> usize {
    (size + 2 - 3) / 2 + 1
}

/// Spatial sizes through the three encoder convolutions: [s0, s1, s2, s3].
pub fn conv_sizes(image_size: usize) -> [usize; 4] {
    let s1 = conv_out(image_size);
    let s2 = conv_out(s1);
    let s3 = conv_out(s2);
    [image_size, s1, s2, s3]
}

/// Output padding that makes a stride-2 transposed convolution
/// grow `from` back to exactly `to`. Always 0 or 1.
fn padding_out(from: usize, to: usize) -> usize {
    to + 1 - 2 * from
}

fn encoder_conv<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3])
        .with_stride([2, 2])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init(device)
}

fn decoder_deconv<B: Backend>(
    channels: [usize; 2],
    out_pad:  usize,
    device:   &B::Device,
) -> ConvTranspose2d<B> {
    ConvTranspose2dConfig::new(channels, [3, 3])
        .with_stride([2, 2])
        .with_padding([1, 1])
        .with_padding_out([out_pad, out_pad])
        .init(device)
}

// ─── ConvEncoder ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ConvEncoderConfig {
    pub image_size:   usize,
    pub channels:     usize,
    pub filters:      usize,
    pub output_width: usize,
}

impl ConvEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvEncoder<B> {
        let f = self.filters;
        let [_, _, _, s3] = conv_sizes(self.image_size);
        ConvEncoder {
            conv1:        encoder_conv([self.channels, f], device),
            conv2:        encoder_conv([f, 2 * f], device),
            conv3:        encoder_conv([2 * f, 4 * f], device),
            head:         LinearConfig::new(4 * f * s3 * s3, self.output_width).init(device),
            image_size:   self.image_size,
            channels:     self.channels,
            output_width: self.output_width,
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvEncoder<B: Backend> {
    pub conv1:    Conv2d<B>,
    pub conv2:    Conv2d<B>,
    pub conv3:    Conv2d<B>,
    pub head:     Linear<B>,
    image_size:   usize,
    channels:     usize,
    output_width: usize,
}

impl<B: Backend> FeatureTransform<B> for ConvEncoder<B> {
    fn transform(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = input.dims();
        let s = self.image_size;

        // [N, H*W*C] → [N, H, W, C] → [N, C, H, W]
        let x = input
            .reshape([batch, s, s, self.channels])
            .swap_dims(1, 3)
            .swap_dims(2, 3);

        let x = relu(self.conv1.forward(x));
        let x = relu(self.conv2.forward(x));
        let x = relu(self.conv3.forward(x));

        let [_, c, h, w] = x.dims();
        self.head.forward(x.reshape([batch, c * h * w]))
    }

    fn input_width(&self) -> usize {
        self.image_size * self.image_size * self.channels
    }

    fn output_width(&self) -> usize { self.output_width }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for ConvEncoder<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        self.conv1.grad_squared_norm(grads)
            + self.conv2.grad_squared_norm(grads)
            + self.conv3.grad_squared_norm(grads)
            + self.head.grad_squared_norm(grads)
    }
}

// ─── ConvDecoder ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ConvDecoderConfig {
    pub latent_dim: usize,
    pub image_size: usize,
    pub channels:   usize,
    pub filters:    usize,
}

impl ConvDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvDecoder<B> {
        let f = self.filters;
        let [s0, s1, s2, s3] = conv_sizes(self.image_size);
        ConvDecoder {
            project:    LinearConfig::new(self.latent_dim, 4 * f * s3 * s3).init(device),
            deconv1:    decoder_deconv([4 * f, 2 * f], padding_out(s3, s2), device),
            deconv2:    decoder_deconv([2 * f, f], padding_out(s2, s1), device),
            deconv3:    decoder_deconv([f, self.channels], padding_out(s1, s0), device),
            latent_dim: self.latent_dim,
            image_size: self.image_size,
            channels:   self.channels,
            filters:    f,
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvDecoder<B: Backend> {
    pub project: Linear<B>,
    pub deconv1: ConvTranspose2d<B>,
    pub deconv2: ConvTranspose2d<B>,
    pub deconv3: ConvTranspose2d<B>,
    latent_dim:  usize,
    image_size:  usize,
    channels:    usize,
    filters:     usize,
}

impl<B: Backend> FeatureTransform<B> for ConvDecoder<B> {
    fn transform(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = input.dims();
        let [s0, _, _, s3] = conv_sizes(self.image_size);

        let x = relu(self.project.forward(input));
        let x = x.reshape([batch, 4 * self.filters, s3, s3]);

        let x = relu(self.deconv1.forward(x));
        let x = relu(self.deconv2.forward(x));
        let x = self.deconv3.forward(x); // [N, C, H, W], linear output

        // [N, C, H, W] → [N, H, W, C] → [N, H*W*C]
        x.swap_dims(1, 2)
            .swap_dims(2, 3)
            .reshape([batch, s0 * s0 * self.channels])
    }

    fn input_width(&self) -> usize { self.latent_dim }

    fn output_width(&self) -> usize {
        self.image_size * self.image_size * self.channels
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for ConvDecoder<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        self.project.grad_squared_norm(grads)
            + self.deconv1.grad_squared_norm(grads)
            + self.deconv2.grad_squared_norm(grads)
            + self.deconv3.grad_squared_norm(grads)
    }
}

// ─── FeatureNet ───────────────────────────────────────────────────────────────
/// Any of the supported networks. Encoder and Decoder hold one of these.
#[derive(Module, Debug)]
pub enum FeatureNet<B: Backend> {
    Mlp(Mlp<B>),
    ConvEncoder(ConvEncoder<B>),
    ConvDecoder(ConvDecoder<B>),
}

impl<B: Backend> FeatureNet<B> {
    /// Run the network after checking the batch is non-empty and
    /// has the width this network was built for.
    pub fn forward(&self, input: Tensor<B, 2>) -> Result<Tensor<B, 2>, VaeError> {
        let [batch, width] = input.dims();
        if batch == 0 {
            return Err(VaeError::EmptyBatch);
        }
        let expected = self.input_width();
        if width != expected {
            return Err(VaeError::InputWidthMismatch { expected, found: width });
        }
        Ok(self.transform(input))
    }
}

impl<B: Backend> FeatureTransform<B> for FeatureNet<B> {
    fn transform(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            FeatureNet::Mlp(net)         => net.transform(input),
            FeatureNet::ConvEncoder(net) => net.transform(input),
            FeatureNet::ConvDecoder(net) => net.transform(input),
        }
    }

    fn input_width(&self) -> usize {
        match self {
            FeatureNet::Mlp(net)         => net.input_width(),
            FeatureNet::ConvEncoder(net) => net.input_width(),
            FeatureNet::ConvDecoder(net) => net.input_width(),
        }
    }

    fn output_width(&self) -> usize {
        match self {
            FeatureNet::Mlp(net)         => net.output_width(),
            FeatureNet::ConvEncoder(net) => net.output_width(),
            FeatureNet::ConvDecoder(net) => net.output_width(),
        }
    }
}

impl<B: AutodiffBackend> GradSquaredNorm<B> for FeatureNet<B> {
    fn grad_squared_norm(&self, grads: &B::Gradients) -> f64 {
        match self {
            FeatureNet::Mlp(net)         => net.grad_squared_norm(grads),
            FeatureNet::ConvEncoder(net) => net.grad_squared_norm(grads),
            FeatureNet::ConvDecoder(net) => net.grad_squared_norm(grads),
        }
    }
}

impl<B: Backend> From<Mlp<B>> for FeatureNet<B> {
    fn from(net: Mlp<B>) -> Self { FeatureNet::Mlp(net) }
}

impl<B: Backend> From<ConvEncoder<B>> for FeatureNet<B> {
    fn from(net: ConvEncoder<B>) -> Self { FeatureNet::ConvEncoder(net) }
}

impl<B: Backend> From<ConvDecoder<B>> for FeatureNet<B> {
    fn from(net: ConvDecoder<B>) -> Self { FeatureNet::ConvDecoder(net) }
}
